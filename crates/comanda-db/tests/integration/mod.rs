mod bot_tests;
mod catalog_tests;
mod common;
mod order_tests;
