//! Newtype identifiers for type-safe references.
//!
//! Every identifier in this system is an opaque string minted by someone
//! else (the payment gateway, the identity provider) or by the site itself
//! (visitor keys, checkout receipts). Use the `define_id!` macro so these can
//! never be mixed up.

/// Macro to define a type-safe string identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `Display` and `From<String>` / `From<&str>` implementations
///
/// # Example
///
/// ```rust
/// # use dpicon_core::define_id;
/// define_id!(OrderRef);
/// define_id!(InvoiceRef);
///
/// let order = OrderRef::new("order_1");
/// assert_eq!(order.as_str(), "order_1");
///
/// // These are different types, so this won't compile:
/// // let _: InvoiceRef = order;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

// Visitor key stored in the cookie session; scopes all per-visitor state.
define_id!(VisitorId);
// Payment identifier returned by the payment widget on success.
define_id!(PaymentId);
// Client-side receipt attached to a checkout when the widget is opened.
define_id!(ReceiptId);
// Stable subject identifier assigned by the identity provider.
define_id!(SubjectId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_as_str_agree() {
        let id = PaymentId::new("pay_29QQoUBi66xm2f");
        assert_eq!(id.to_string(), "pay_29QQoUBi66xm2f");
        assert_eq!(id.as_str(), "pay_29QQoUBi66xm2f");
    }

    #[test]
    fn test_serde_transparent() {
        let id = VisitorId::from("abc");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"abc\""));
    }
}
