use crate::services::operation::{BodyDef, Field, OperationDef};

pub const OPERATIONS: &[OperationDef] = &[OperationDef::post("execute_proposal", "/propostas/efetivar")
    .body(BodyDef::Fields(&[
        Field::same("cliente"),
        Field::same("negociacao"),
        Field::new("meio_pagamento", "meioPagamento"),
        Field::new("data_vigencia", "dataVigencia"),
        Field::same("parcelas"),
        Field::same("parcelamentos"),
    ]))];
