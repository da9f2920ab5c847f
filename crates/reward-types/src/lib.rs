pub mod api;
pub mod models;

pub use models::{NewTask, NewUser, Task, TaskId, User, UserId};
