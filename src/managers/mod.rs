//! Per-resource operation tables. Each module declares its endpoints as data; the
//! generic `ResourceOperation` executes them.

pub mod agreements;
pub mod batches;
pub mod boletos;
pub mod clients;
pub mod commissions;
pub mod contracts;
pub mod global;
pub mod installments;
pub mod negotiations;
pub mod pix;
pub mod proposals;
pub mod tabulations;

use crate::services::operation::OperationDef;

pub fn all_operations() -> Vec<&'static OperationDef> {
    [
        global::OPERATIONS,
        batches::OPERATIONS,
        clients::OPERATIONS,
        contracts::OPERATIONS,
        installments::OPERATIONS,
        negotiations::OPERATIONS,
        agreements::OPERATIONS,
        proposals::OPERATIONS,
        commissions::OPERATIONS,
        tabulations::OPERATIONS,
        pix::OPERATIONS,
        boletos::OPERATIONS,
    ]
    .into_iter()
    .flat_map(|ops| ops.iter())
    .collect()
}
