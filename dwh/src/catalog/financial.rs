use crate::catalog::columns::{DATE_KEY, LOAD_TIMESTAMP, SYMBOL};
use crate::catalog::{AttributeSpec, CategorySpec, DateKeySpec, DimensionSpec, FactSpec, StagingSpec};
use crate::conversions::numeric::FixedDecimal;
use crate::types::ColumnType;

/// Leading characters of `report_type` kept in the category code: `annual` becomes
/// `ANNUAL` and `quarterly` becomes `QUARTER`.
pub const REPORT_TYPE_CODE_WIDTH: usize = 7;

/// Name of the date dimension.
pub const DATE_DIMENSION: &str = "dim_time";

const TEXT: ColumnType = ColumnType::Text;
const MEASURE: ColumnType = ColumnType::Numeric(Some(FixedDecimal::new(30, 4)));
const CASH_FLOW_MEASURE: ColumnType = ColumnType::Numeric(Some(FixedDecimal::new(20, 4)));

macro_rules! attributes {
    ($typ:expr; $($name:literal),+ $(,)?) => {
        &[$(AttributeSpec::new($name, $typ)),+]
    };
}

const REPORT_TYPE: Option<CategorySpec> = Some(CategorySpec {
    key_column: "report_type_code",
    source_column: "report_type",
    width: REPORT_TYPE_CODE_WIDTH,
});

const FISCAL_DATE_KEY: DateKeySpec = DateKeySpec {
    key_column: "fiscal_date_key",
    source_column: "fiscal_date_ending",
    required: true,
};

const TRADING_DATE_KEY: DateKeySpec = DateKeySpec {
    key_column: DATE_KEY,
    source_column: "date",
    required: true,
};

/// Raw tables copied into staging. Every extractor stamps `load_timestamp`.
pub static STAGING_TABLES: &[StagingSpec] = &[
    StagingSpec {
        source: "raw_yfinance",
        watermark_column: Some(LOAD_TIMESTAMP),
    },
    StagingSpec {
        source: "fmp_company_market_cap",
        watermark_column: Some(LOAD_TIMESTAMP),
    },
    StagingSpec {
        source: "fmp_company_information",
        watermark_column: Some(LOAD_TIMESTAMP),
    },
    StagingSpec {
        source: "alphavantage_cash_flow",
        watermark_column: Some(LOAD_TIMESTAMP),
    },
    StagingSpec {
        source: "alphavantage_income_statement",
        watermark_column: Some(LOAD_TIMESTAMP),
    },
    StagingSpec {
        source: "alphavantage_balance_sheet",
        watermark_column: Some(LOAD_TIMESTAMP),
    },
    StagingSpec {
        source: "alphavantage_earnings",
        watermark_column: Some(LOAD_TIMESTAMP),
    },
];

/// Company profile dimension, versioned on every change of a tracked attribute.
pub static COMPANY_DIMENSION: DimensionSpec = DimensionSpec {
    name: "dim_company_informations",
    source: "fmp_company_information",
    natural_key: SYMBOL,
    tracked: &[
        AttributeSpec::new("company_name", TEXT),
        AttributeSpec::new("exchange_code", TEXT),
        AttributeSpec::new("sector", TEXT),
        AttributeSpec::new("industry", TEXT),
        AttributeSpec::new("ceo", TEXT),
        AttributeSpec::new("country", TEXT),
        AttributeSpec::new("full_time_employees", ColumnType::BigInt),
        AttributeSpec::new("address", TEXT),
        AttributeSpec::new("city", TEXT),
        AttributeSpec::new("state", TEXT),
        AttributeSpec::new("zip", TEXT),
    ],
    passthrough: &[
        AttributeSpec::new("cik", TEXT),
        AttributeSpec::new("isin", TEXT),
        AttributeSpec::new("cusip", TEXT),
        AttributeSpec::new("exchange_full_name", TEXT),
        AttributeSpec::new("ipo_date", ColumnType::Date),
        AttributeSpec::new("is_etf", ColumnType::Boolean),
        AttributeSpec::new("is_fund", ColumnType::Boolean),
        AttributeSpec::new("is_adr", ColumnType::Boolean),
        AttributeSpec::new("is_actively_trading", ColumnType::Boolean),
    ],
};

pub static FACT_TABLES: &[FactSpec] = &[
    FactSpec {
        name: "fact_history_stock",
        source: "raw_yfinance",
        entity_column: SYMBOL,
        date_keys: &[TRADING_DATE_KEY],
        category: None,
        attributes: &[],
        measures: &[
            AttributeSpec::new("open_price", MEASURE),
            AttributeSpec::new("high_price", MEASURE),
            AttributeSpec::new("low_price", MEASURE),
            AttributeSpec::new("close_price", MEASURE),
            AttributeSpec::new("volume", ColumnType::BigInt),
        ],
    },
    FactSpec {
        name: "fact_market_cap",
        source: "fmp_company_market_cap",
        entity_column: SYMBOL,
        date_keys: &[TRADING_DATE_KEY],
        category: None,
        attributes: &[],
        measures: attributes!(MEASURE; "market_cap"),
    },
    FactSpec {
        name: "fact_cash_flow",
        source: "alphavantage_cash_flow",
        entity_column: SYMBOL,
        date_keys: &[FISCAL_DATE_KEY],
        category: REPORT_TYPE,
        attributes: attributes!(TEXT; "reported_currency"),
        measures: attributes!(CASH_FLOW_MEASURE;
            "operating_cashflow",
            "payments_for_operating_activities",
            "proceeds_from_operating_activities",
            "change_in_operating_liabilities",
            "change_in_operating_assets",
            "depreciation_depletion_and_amortization",
            "change_in_receivables",
            "change_in_inventory",
            "capital_expenditures",
            "cashflow_from_investment",
            "cashflow_from_financing",
            "proceeds_from_repayments_of_short_term_debt",
            "payments_for_repurchase_of_common_stock",
            "payments_for_repurchase_of_equity",
            "payments_for_repurchase_of_preferred_stock",
            "dividend_payout",
            "dividend_payout_common_stock",
            "dividend_payout_preferred_stock",
            "proceeds_from_issuance_of_common_stock",
            "proceeds_from_issuance_of_long_term",
            "proceeds_from_issuance_of_preferred_stock",
            "proceeds_from_repurchase_of_equity",
            "proceeds_from_sale_of_treasury_stock",
            "change_in_cash_and_cash_equivalents",
            "change_in_exchange_rate",
            "net_income",
        ),
    },
    FactSpec {
        name: "fact_income_statement",
        source: "alphavantage_income_statement",
        entity_column: SYMBOL,
        date_keys: &[FISCAL_DATE_KEY],
        category: REPORT_TYPE,
        attributes: attributes!(TEXT; "reported_currency"),
        measures: attributes!(MEASURE;
            "total_revenue",
            "gross_profit",
            "cost_of_revenue",
            "cost_of_goods_and_services_sold",
            "operating_income",
            "selling_general_and_administrative",
            "research_and_development",
            "operating_expenses",
            "investment_income_net",
            "net_interest_income",
            "interest_income",
            "interest_expense",
            "non_interest_income",
            "other_non_operating_income",
            "depreciation",
            "depreciation_and_amortization",
            "income_before_tax",
            "income_tax_expense",
            "interest_and_debt_expense",
            "net_income_from_continuing_operations",
            "comprehensive_income_net_of_tax",
            "ebit",
            "ebitda",
            "net_income",
        ),
    },
    FactSpec {
        name: "fact_balance_sheet",
        source: "alphavantage_balance_sheet",
        entity_column: SYMBOL,
        date_keys: &[FISCAL_DATE_KEY],
        category: REPORT_TYPE,
        attributes: attributes!(TEXT; "reported_currency"),
        measures: attributes!(MEASURE;
            "total_assets",
            "total_current_assets",
            "cash_and_cash_equivalents_at_carrying_value",
            "cash_and_short_term_investments",
            "inventory",
            "current_net_receivables",
            "total_non_current_assets",
            "property_plant_equipment",
            "accumulated_depreciation_amortization_ppe",
            "intangible_assets",
            "intangible_assets_excluding_goodwill",
            "goodwill",
            "investments",
            "long_term_investments",
            "short_term_investments",
            "other_current_assets",
            "other_non_current_assets",
            "total_liabilities",
            "total_current_liabilities",
            "current_accounts_payable",
            "deferred_revenue",
            "current_debt",
            "short_term_debt",
            "total_non_current_liabilities",
            "capital_lease_obligations",
            "long_term_debt",
            "current_long_term_debt",
            "long_term_debt_noncurrent",
            "short_long_term_debt_total",
            "other_current_liabilities",
            "other_non_current_liabilities",
            "total_shareholder_equity",
            "treasury_stock",
            "retained_earnings",
            "common_stock",
            "common_stock_shares_outstanding",
        ),
    },
    FactSpec {
        name: "fact_earnings",
        source: "alphavantage_earnings",
        entity_column: SYMBOL,
        date_keys: &[
            FISCAL_DATE_KEY,
            DateKeySpec {
                key_column: "reported_date_key",
                source_column: "reported_date",
                required: false,
            },
        ],
        category: REPORT_TYPE,
        attributes: attributes!(TEXT; "reported_time"),
        measures: attributes!(MEASURE;
            "reported_eps",
            "estimated_eps",
            "surprise",
            "surprise_percentage",
        ),
    },
];
