//! # State Module
//!
//! Terminal-scoped state shared across services.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PosApp                                                                 │
//! │   ├── Database   (caja-db, pool shared by all services)                 │
//! │   ├── CartState  (Arc<Mutex<Cart>>, one per terminal)                   │
//! │   └── AuthState  (current signed-in user)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cart;

pub use cart::CartState;
