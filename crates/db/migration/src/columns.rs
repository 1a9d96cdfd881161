use sea_orm_migration::prelude::*;

pub(crate) fn uuid_pk_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().primary_key().to_owned()
}

pub(crate) fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

pub(crate) fn uuid_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().to_owned()
}

pub(crate) fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

pub(crate) fn timestamp_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).timestamp_with_time_zone().to_owned()
}

pub(crate) fn status_col<T: Iden>(col: T, default: &'static str) -> ColumnDef {
    ColumnDef::new(col)
        .string_len(32)
        .not_null()
        .default(Expr::val(default))
        .to_owned()
}
