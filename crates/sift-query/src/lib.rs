mod coerce;
pub mod docs;
mod features;
mod normalize;
mod operator;
mod params;
mod sort;

pub use coerce::{coerce, coerce_operand, coerce_scalar, parse_date, parse_number, parse_object_id};
pub use docs::{ParamDoc, describe_list_params, describe_single_params};
pub use features::{
    DEFAULT_SORT_FIELD, QueryFeatures, RESERVED_PARAMS, SingleQueryFeatures, is_reserved,
};
pub use normalize::{Mode, ParsedQuery, parse, parse_many, parse_single};
pub use operator::{Comparator, parse_comparison, rewrite_comparators};
pub use params::{ParamsError, QueryParams};
pub use sort::{Sort, SortDirection, sort_document};
