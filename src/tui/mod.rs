pub mod app;
pub mod chat_view;
pub mod input;
pub mod layout;
pub mod status_bar;
pub mod todo_list;
