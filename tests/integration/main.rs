//! Integration tests for the media engine, run entirely on the
//! in-process fallback backend with `sh` standing in for the media
//! tools.

mod helpers;

mod cancel_test;
mod capacity_test;
mod lifecycle_test;
mod submission_test;
