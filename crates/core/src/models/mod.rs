pub mod patron;
