pub mod feedback;

pub use feedback::{ControlState, FeedbackPresenter, Notification, NoticeKind};
