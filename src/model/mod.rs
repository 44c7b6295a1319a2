mod sequential;

pub use sequential::Sequential;
