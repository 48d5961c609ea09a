/*!
 * Translation of extracted units.
 *
 * - `executor`: bounded worker pool with retry, backoff and rate-limit abort
 * - `concurrency`: default pool sizes per provider
 */

pub use self::concurrency::ProviderProfile;
pub use self::executor::{ExecutionReport, RetryPolicy, TranslationExecutor};

pub mod concurrency;
pub mod executor;
