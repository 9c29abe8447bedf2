pub mod batch;
pub mod moderation;
pub mod normalize;
pub mod secondary;
pub mod signals;
