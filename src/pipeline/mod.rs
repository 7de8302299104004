//! Pipeline stages for batch invoice processing.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a different splitting backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! source PDF ──▶ segment ──▶ split ──▶ extract ──▶ persist
//!  (bytes)     (classifier) (lopdf)  (per split)  (records)
//! ```
//!
//! 1. [`segment`] — ask the classifier for invoice page ranges; the only
//!    stage that can abort the whole batch on a model answer
//! 2. [`split`]   — cut the source into per-range PDFs; runs in
//!    `spawn_blocking` because lopdf is synchronous CPU-bound work
//! 3. [`extract`] — pull the requested field set out of one split document,
//!    with the shared rate-limit retry policy
//! 4. [`persist`] — turn successful extractions into `Pending` records,
//!    isolating per-document failures

pub mod extract;
pub mod persist;
pub mod segment;
pub mod split;
