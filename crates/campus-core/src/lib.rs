pub mod account;
pub mod ids;

pub use account::{AccountDraft, AccountView, Password, ScheduleProfile};
pub use ids::{AccountId, ProjectId};
