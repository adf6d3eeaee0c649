//! Core library for balloon
//!
//! This crate implements the **Functional Core** of the balloon report
//! toolkit, following the Functional Core - Imperative Shell architectural
//! pattern.
//!
//! # Architecture Overview
//!
//! - **`balloon_core`** (this crate): Pure transformation functions with zero I/O
//! - **`pdf`**: Reading spans off PDF pages (text layer or OCR)
//! - **`docx_template`**: Populating report templates
//! - **`balloon`**: I/O operations and orchestration (the Imperative Shell)
//!
//! ## Functional Core Principles
//!
//! All functions in this crate adhere to these principles:
//!
//! - **Pure functions**: Same input always produces the same output
//! - **No side effects**: No I/O operations, no external state mutations
//! - **Testable**: Can be tested with simple fixture data, no mocking required
//!
//! # Module Organization
//!
//! - [`span`]: Shared data model (spans, balloons, match results)
//! - [`proximity`]: Nearest-text lookup around a point
//! - [`matching`]: Numeric-then-fuzzy row matching
//! - [`placeholder`]: Placeholder substitution across split text segments
//! - [`config`]: Tunable parameters and their defaults
//!
//! # Example Usage
//!
//! ```rust
//! use balloon_core::proximity::resolve;
//! use balloon_core::span::TextSpan;
//!
//! let spans = vec![TextSpan::new(98.0, 99.0, 102.0, 101.0, "12.5").unwrap()];
//! assert_eq!(resolve(&spans, 101.0, 101.0, 5.0), vec!["12.5"]);
//! ```

pub mod config;
pub mod matching;
pub mod placeholder;
pub mod proximity;
pub mod span;

pub use span::{Balloon, MatchResult, PageSpans, SpanOrigin, TextSpan};
