//! Tabula: entity-to-SQL mapping.
//!
//! This facade crate re-exports the Tabula sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use tabula::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature    | Default | Crate                        |
//! |------------|---------|------------------------------|
//! | `sqlx`     | **yes** | `tabula-data-sqlx`           |
//! | `sqlite`   | no      | `tabula-data-sqlx/sqlite`    |
//! | `postgres` | no      | `tabula-data-sqlx/postgres`  |

// The derives use `proc-macro-crate` to detect whether the user depends on
// `tabula` (facade) or `tabula-data`, and generate the correct paths.
pub extern crate tabula_data;
pub extern crate tabula_macros;

// Re-export everything from tabula-data at the top level for convenience.
pub use tabula_data::*;

#[cfg(feature = "sqlx")]
pub use tabula_data_sqlx;

#[cfg(feature = "sqlx")]
pub use tabula_data_sqlx::{HasPool, SqlxErrorExt, SqlxSession};

pub mod prelude {
    //! Re-exports of the most commonly used types.
    pub use tabula_data::prelude::*;

    #[cfg(feature = "sqlx")]
    pub use tabula_data_sqlx::{HasPool, SqlxSession};
}
