//! Operation-specific templates.
//!
//! Each entrypoint validates only the sub-tree it may mutate, against a
//! template rooted at that sub-object. The constructors here are the
//! single source of truth for those shapes; the validator consumes them
//! without knowing the business meaning of any field.

use crate::schema::Schema;

/// Whole slot as required at mint time
pub fn slot() -> Schema {
    Schema::object(vec![
        ("BasicInformation", basic_information()),
        ("AdditionalInformation", additional_information()),
    ])
}

/// Zone fixed at mint
pub fn basic_information() -> Schema {
    Schema::object(vec![(
        "SimpleTicket",
        Schema::object(vec![
            ("scenic_id", Schema::string()),
            ("scenic_name", Schema::string()),
            ("ticket_name", Schema::string()),
            ("ticket_type", Schema::number()),
            ("use_valid_type", Schema::number()),
            ("validity_begin", Schema::string()),
            ("validity_end", Schema::string()),
            ("use_count", Schema::number()),
        ]),
    )])
}

/// Zone mutated by narrow-scope update operations
pub fn additional_information() -> Schema {
    Schema::object(vec![
        ("PriceInfo", Schema::array(price_info_entry())),
        ("TicketData", Schema::array(ticket_check_data())),
        ("IssueInfo", issue_ticket()),
        ("TicketStatus", Schema::number()),
    ])
}

/// One distributor's price entry inside `PriceInfo`
fn price_info_entry() -> Schema {
    Schema::object(vec![
        ("distributor_id", Schema::string()),
        ("PriceDetailedInfo", price_detailed_info()),
    ])
}

/// Price sub-object validated by `UpdatePriceInfo`
pub fn price_detailed_info() -> Schema {
    Schema::object(vec![
        ("buy_fee", Schema::number()),
        ("sale_price", Schema::number()),
        ("compose_price", Schema::number()),
        ("commission_rate", Schema::number()),
        ("is_compose", Schema::boolean()),
        ("group", Schema::array(Schema::string())),
    ])
}

/// One gate-check record validated by `VerifyTicket`
pub fn ticket_check_data() -> Schema {
    Schema::object(vec![
        ("check_point_id", Schema::string()),
        ("check_point_name", Schema::string()),
        ("check_type", Schema::number()),
        ("check_time", Schema::string()),
        ("check_number", Schema::number()),
        ("operator_id", Schema::string()),
    ])
}

/// Issue batch validated by `UpdateIssueTickets`
pub fn issue_ticket() -> Schema {
    Schema::object(vec![
        ("issue_batch_id", Schema::string()),
        ("issue_time", Schema::string()),
        ("issue_count", Schema::number()),
        ("issue_channel", Schema::number()),
    ])
}

/// Batch status sweep validated by `TimerUpdateTickets`
pub fn timer_update() -> Schema {
    Schema::array(Schema::object(vec![
        ("token_id", Schema::string()),
        ("TicketStatus", Schema::number()),
    ]))
}

/// Order payload validated by `StoreOrder`
pub fn order() -> Schema {
    Schema::object(vec![
        ("order_id", Schema::string()),
        ("buyer_id", Schema::string()),
        ("order_time", Schema::string()),
        ("payment_amount", Schema::number()),
        (
            "batches",
            Schema::array(Schema::object(vec![
                ("batch_id", Schema::string()),
                ("token_id", Schema::string()),
                ("seller_id", Schema::string()),
                ("quantity", Schema::number()),
                ("unit_price", Schema::number()),
                ("available_ratio", Schema::number()),
            ])),
        ),
    ])
}

/// Refund payload validated by `StoreRefund`
pub fn refund() -> Schema {
    Schema::object(vec![
        ("refund_id", Schema::string()),
        ("order_id", Schema::string()),
        ("refund_time", Schema::string()),
        ("refund_amount", Schema::number()),
        (
            "batches",
            Schema::array(Schema::object(vec![
                ("batch_id", Schema::string()),
                ("token_id", Schema::string()),
                ("quantity", Schema::number()),
            ])),
        ),
    ])
}

/// Split-transfer payload validated by `DistributionOrder` and
/// `DistributionRefund`
pub fn distribution() -> Schema {
    Schema::object(vec![
        ("distribution_id", Schema::string()),
        ("order_id", Schema::string()),
        (
            "lines",
            Schema::array(Schema::object(vec![
                ("from_token_id", Schema::string()),
                ("to_token_id", Schema::string()),
                ("to_owner", Schema::string()),
                ("quantity", Schema::number()),
                ("available_ratio", Schema::number()),
                ("available_total_num", Schema::number()),
            ])),
        ),
    ])
}
