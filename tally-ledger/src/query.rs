use chrono::NaiveDate;
use tally_core::{ParentRef, PaymentMethod};

/// Filter describing which payments to load from storage. The acting
/// tenant is never part of the filter; repository methods take it as an
/// explicit argument so it can only come from the tenant resolver.
#[derive(Clone, Debug, Default)]
pub struct PaymentQuery {
    pub parent: Option<ParentRef>,
    pub method: Option<PaymentMethod>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PaymentQuery {
    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}
