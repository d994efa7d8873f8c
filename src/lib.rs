pub mod coordinator;
pub mod note;
pub mod output;
pub mod play;
pub mod ringer;
pub mod song;
pub mod wave;
