pub use cas_error::CasError;

mod cas_error;
