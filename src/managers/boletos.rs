use crate::services::operation::{BodyDef, Field, OperationDef, ResponseShape};

pub const OPERATIONS: &[OperationDef] = &[
    OperationDef::get("list_boletos", "/boletos")
        .query(&[
            Field::same("cliente"),
            Field::same("contrato"),
            Field::same("parcela"),
            Field::same("situacao"),
            Field::new("data_vencimento_inicio", "dataVencimentoInicio"),
            Field::new("data_vencimento_fim", "dataVencimentoFim"),
            Field::same("registrado"),
        ])
        .shape(ResponseShape::AllPages),
    OperationDef::get("get_boleto", "/boletos/{id}"),
    OperationDef::get("get_boleto_pdf", "/boletos/{id}.pdf")
        .shape(ResponseShape::Binary("application/pdf")),
    OperationDef::post("register_boleto", "/boletos/{id}/registrar"),
    OperationDef::post("register_boletos", "/boletos/registrar")
        .body(BodyDef::Fields(&[Field::new("ids", "boletos")])),
];
