//! The library code for the blog and the static site generator that builds
//! it. The architecture breaks down into two layers:
//!
//! 1. Working out where things go ([`crate::resolver`]). A [`Resolver`] maps
//!    the source, target and server roots to concrete paths and links.
//! 2. Building the site ([`crate::build`]) as a sequence of steps run through
//!    a [`Pipeline`], which only regenerates targets whose dependencies
//!    changed since the last build ([`crate::cache`]).
//!
//! The steps are composed from small pieces: front matter parsing
//! ([`crate::metadata`]), markdown rendering ([`crate::markdown`]), templating
//! ([`crate::template`]) and the Atom feed ([`crate::feed`]).
//!
//! [`Resolver`]: crate::resolver::Resolver
//! [`Pipeline`]: crate::pipeline::Pipeline

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod article;
pub mod build;
pub mod cache;
pub mod config;
pub mod feed;
pub mod markdown;
pub mod metadata;
pub mod pipeline;
pub mod resolver;
pub mod serve;
pub mod template;
