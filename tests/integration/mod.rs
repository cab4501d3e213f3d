pub mod support;

mod pipeline;
mod reporting;
