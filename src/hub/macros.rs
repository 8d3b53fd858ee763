//! `define_event!` - typed events and their topic filters
//!
//! ```ignore
//! define_event! {
//!     #[derive(Debug, Clone)]
//!     pub struct IncrementEvent / IncrementEventFilter {
//!         topics { pub by: Principal }
//!         values { pub current_value: u64 }
//!     }
//! }
//! ```
//!
//! Expands to the event struct, a filter struct with every topic as an
//! `Option`, and the `EventPayload` / `TopicFilter` implementations. Topic
//! fields are matchable by listeners; value fields are carried only.

#[macro_export]
macro_rules! define_event {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident / $filter:ident {
            topics { $($tvis:vis $topic:ident : $tty:ty),* $(,)? }
            values { $($vvis:vis $value:ident : $vty:ty),* $(,)? }
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($tvis $topic: $tty,)*
            $($vvis $value: $vty,)*
        }

        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $filter {
            $($tvis $topic: ::std::option::Option<$tty>,)*
        }

        impl $crate::hub::EventPayload for $name {
            const NAME: &'static str = stringify!($name);

            fn to_event(&self) -> ::std::result::Result<$crate::hub::Event, $crate::hub::CodecError> {
                #[allow(unused_mut)]
                let mut topics = ::std::collections::BTreeSet::new();
                topics.insert($crate::hub::EventField::encode(
                    $crate::hub::EVENT_NAME_FIELD,
                    Self::NAME,
                )?);
                $(
                    topics.insert($crate::hub::EventField::encode(stringify!($topic), &self.$topic)?);
                )*

                ::std::result::Result::Ok($crate::hub::Event {
                    topics,
                    values: vec![
                        $( $crate::hub::EventField::encode(stringify!($value), &self.$value)?, )*
                    ],
                })
            }

            fn from_event(event: $crate::hub::Event) -> ::std::result::Result<Self, $crate::hub::CodecError> {
                #[allow(unused_variables)]
                let fields = event.into_field_map();

                ::std::result::Result::Ok(Self {
                    $( $topic: $crate::hub::codec::decode_field(&fields, stringify!($topic))?, )*
                    $( $value: $crate::hub::codec::decode_field(&fields, stringify!($value))?, )*
                })
            }
        }

        impl $crate::hub::TopicFilter for $filter {
            fn to_event_filter(&self) -> ::std::result::Result<$crate::hub::EventFilter, $crate::hub::CodecError> {
                #[allow(unused_mut)]
                let mut topics = ::std::collections::BTreeSet::new();
                topics.insert($crate::hub::EventField::encode(
                    $crate::hub::EVENT_NAME_FIELD,
                    <$name as $crate::hub::EventPayload>::NAME,
                )?);
                $(
                    if let ::std::option::Option::Some(value) = &self.$topic {
                        topics.insert($crate::hub::EventField::encode(stringify!($topic), value)?);
                    }
                )*

                ::std::result::Result::Ok($crate::hub::EventFilter(topics))
            }

            fn from_event_filter(filter: $crate::hub::EventFilter) -> ::std::result::Result<Self, $crate::hub::CodecError> {
                #[allow(unused_variables)]
                let fields = filter.into_field_map();

                ::std::result::Result::Ok(Self {
                    $( $topic: $crate::hub::codec::decode_optional_field(&fields, stringify!($topic))?, )*
                })
            }
        }
    };
}
