pub mod alarms;
pub mod builder;
pub mod duration;
pub mod speech;
