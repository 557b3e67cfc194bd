pub mod category;
pub mod change;
pub mod complaint;
pub mod notification;
pub mod rule;
pub mod timeline;
pub mod user;
