pub mod dispatcher;
pub mod formatter;
pub mod notifier;

pub use dispatcher::{dispatch_all, DispatchReport};
pub use formatter::AlertFormatter;
pub use notifier::{LogNotifier, Notifier, TelegramNotifier};
