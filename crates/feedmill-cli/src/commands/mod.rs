pub mod category;
pub mod edit;
pub mod list;
pub mod refresh;
pub mod reset_errors;
pub mod subscribe;
pub mod unsubscribe;
