use crate::services::operation::{BodyDef, Field, OperationDef, ResponseShape};

pub const OPERATIONS: &[OperationDef] = &[
    OperationDef::get("get_pix_qrcode", "/pix/{id}.png").shape(ResponseShape::Binary("image/png")),
    OperationDef::post("register_pix", "/pix/{id}/registrar"),
    OperationDef::post("register_pix_batch", "/pix/registrar")
        .body(BodyDef::Fields(&[Field::new("ids", "pixs")])),
    OperationDef::post("register_agreement_pix", "/pix/acordos/{id_parcela}/registrar"),
    OperationDef::post("register_agreement_pix_batch", "/pix/acordos/registrar")
        .body(BodyDef::Fields(&[Field::new("ids_parcelas", "parcelas")])),
];
