mod common;
mod duty_stream;
mod queries;
