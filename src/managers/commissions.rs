use crate::services::operation::{Field, OperationDef, ResponseShape};

pub const OPERATIONS: &[OperationDef] = &[OperationDef::get("list_commissions", "/comissoes")
    .query(&[
        Field::same("produto"),
        Field::same("situacao"),
        Field::same("cliente"),
        Field::same("contrato"),
        Field::new("numero_acordo", "numeroAcordo"),
        Field::new("data_inicio", "dataInicio"),
        Field::new("data_fim", "dataFim"),
    ])
    .shape(ResponseShape::AllPages)];
