mod property_tests;
mod stop_order_tests;
