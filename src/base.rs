/// Stable name of a resource, reported in error payloads as `resource_type`/`type_id`.
pub trait ResourceID {
    fn resource_id() -> &'static str;
}

/// Implements [`ResourceID`] for a type with a fixed name.
///
/// ```ignore
/// resource_id!(User, "iam::user");
/// ```
macro_rules! resource_id {
    ($type:ty, $name:literal) => {
        impl crate::base::ResourceID for $type {
            fn resource_id() -> &'static str {
                $name
            }
        }
    };
}

pub(crate) use resource_id;

// Primary keys and payload-less results.
resource_id!(i64, "base::i64");
resource_id!((), "base::empty");
