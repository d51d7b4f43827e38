//! The `legs_core` crate estimates Lyapunov exponent spectra of continuous-time
//! systems by integrating a trajectory together with a re-orthonormalized
//! tangent basis.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (user ODEs), `VectorField` (the field seen by the integrators).
//! - **Equation Engine**: A custom bytecode VM for evaluating user-defined equations over `f64` or `Dual`.
//! - **Autodiff**: Dual numbers and `AutodiffField`, which supplies exact Jacobian-vector products.
//! - **LEGS**: Euler and Heun–Euler tangent integrators with Gram-Schmidt re-orthonormalization.
//! - **Runner**: Batch driver with bounded history and a Kaplan–Yorke summary.
pub mod autodiff;
pub mod equation_engine;
pub mod history;
pub mod jacobian;
pub mod legs;
pub mod orthonormalize;
pub mod projection;
pub mod runner;
pub mod settings;
pub mod traits;
