//! CI Docker images.
//!
//! Each image used by the build pipelines lives in its own folder with a
//! `Dockerfile`. The `docker` subcommand builds an image (and with `--all`
//! its `-base` and `-builder` variants), tags it for the registry and pushes
//! it. The build runs as a given user and group so files written to mounted
//! volumes keep sane ownership.

mod image;

pub use image::{build_and_push, resolve_account};
