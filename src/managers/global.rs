use crate::services::operation::OperationDef;

pub const OPERATIONS: &[OperationDef] = &[OperationDef::get("get_processing_date", "/global")];
