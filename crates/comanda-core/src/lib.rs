pub mod auth;
pub mod bot;
pub mod bot_manager;
pub mod catalog;
pub mod chatbot;
pub mod customer;
pub mod error;
pub mod expense;
pub mod order;
pub mod payment;
pub mod points;
pub mod promotion;
pub mod report;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use bot_manager::BotManager;
pub use chatbot::{ChatbotService, HandledMessage, IncomingMessage};
pub use error::AppError;
pub use traits::{BotStore, MessagingGateway, ReplyGenerator};
