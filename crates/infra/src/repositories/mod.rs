mod complaints;

pub use complaints::*;
