// Diesel table definitions for the LedgerLink schema.

diesel::table! {
    providers (id) {
        id -> Text,
        name -> Text,
        logo_url -> Nullable<Text>,
    }
}

diesel::table! {
    institutions (id) {
        id -> Text,
        provider_id -> Text,
        provider_institution_id -> Text,
        name -> Text,
        logo_url -> Nullable<Text>,
        countries -> Nullable<Text>,
        enabled -> Bool,
    }
}

diesel::table! {
    provider_connections (id) {
        id -> Text,
        user_id -> Text,
        provider_id -> Text,
        secret -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    institution_connections (id) {
        id -> Text,
        provider_connection_id -> Text,
        institution_id -> Text,
        connection_id -> Text,
        broken -> Bool,
        created_at -> Timestamp,
    }
}

diesel::table! {
    accounts (id) {
        id -> Text,
        user_id -> Text,
        name -> Text,
        classification -> Text,
        subtype -> Text,
        currency -> Text,
        value -> Text,
        cost -> Nullable<Text>,
        ticker -> Nullable<Text>,
        parent_id -> Nullable<Text>,
        institution_connection_id -> Nullable<Text>,
        provider_account_id -> Nullable<Text>,
        locked_attributes -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    transactions (id) {
        id -> Text,
        account_id -> Text,
        description -> Text,
        amount -> Text,
        currency -> Text,
        posted_at -> Date,
        provider_transaction_id -> Nullable<Text>,
        locked_attributes -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(institutions -> providers (provider_id));
diesel::joinable!(provider_connections -> providers (provider_id));
diesel::joinable!(institution_connections -> provider_connections (provider_connection_id));
diesel::joinable!(institution_connections -> institutions (institution_id));
diesel::joinable!(transactions -> accounts (account_id));

diesel::allow_tables_to_appear_in_same_query!(
    providers,
    institutions,
    provider_connections,
    institution_connections,
    accounts,
    transactions,
);
