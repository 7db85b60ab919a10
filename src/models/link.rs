//! Group links
//!
//! A link names a member of a group. Only hard links point at an object by
//! identity; soft, external and user-defined links are stored verbatim and may
//! dangle.

use crate::models::identifier::{Collection, Identifier};
use crate::models::properties::LinkCreationProperties;
use serde::{Deserialize, Serialize};

/// Lowest class id HDF5 assigns to user-defined links
pub const USER_DEFINED_LINK_CLASS_MIN: u32 = 64;
pub const USER_DEFINED_LINK_CLASS_MAX: u32 = 255;

/// Whether `class` is in the range reserved for user-defined links
pub fn is_user_defined_link_class(class: u32) -> bool {
    (USER_DEFINED_LINK_CLASS_MIN..=USER_DEFINED_LINK_CLASS_MAX).contains(&class)
}

/// A link, with hard link targets referenced through `R`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum Link<R = Identifier> {
    #[serde(rename = "H5L_TYPE_HARD")]
    Hard {
        title: String,
        collection: Collection,
        id: R,
        #[serde(
            rename = "creationProperties",
            default,
            skip_serializing_if = "LinkCreationProperties::is_empty"
        )]
        properties: LinkCreationProperties,
    },
    #[serde(rename = "H5L_TYPE_SOFT")]
    Soft {
        title: String,
        h5path: String,
        #[serde(
            rename = "creationProperties",
            default,
            skip_serializing_if = "LinkCreationProperties::is_empty"
        )]
        properties: LinkCreationProperties,
    },
    #[serde(rename = "H5L_TYPE_EXTERNAL")]
    External {
        title: String,
        file: String,
        h5path: String,
        #[serde(
            rename = "creationProperties",
            default,
            skip_serializing_if = "LinkCreationProperties::is_empty"
        )]
        properties: LinkCreationProperties,
    },
    #[serde(rename = "H5L_TYPE_USER_DEFINED")]
    UserDefined {
        title: String,
        #[serde(rename = "linkClass")]
        link_class: u32,
        #[serde(default)]
        data: Vec<u8>,
        #[serde(
            rename = "creationProperties",
            default,
            skip_serializing_if = "LinkCreationProperties::is_empty"
        )]
        properties: LinkCreationProperties,
    },
}

impl<R> Link<R> {
    pub fn hard(title: impl Into<String>, collection: Collection, id: R) -> Self {
        Link::Hard {
            title: title.into(),
            collection,
            id,
            properties: LinkCreationProperties::default(),
        }
    }

    pub fn soft(title: impl Into<String>, h5path: impl Into<String>) -> Self {
        Link::Soft {
            title: title.into(),
            h5path: h5path.into(),
            properties: LinkCreationProperties::default(),
        }
    }

    pub fn external(title: impl Into<String>, file: impl Into<String>, h5path: impl Into<String>) -> Self {
        Link::External {
            title: title.into(),
            file: file.into(),
            h5path: h5path.into(),
            properties: LinkCreationProperties::default(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Link::Hard { title, .. }
            | Link::Soft { title, .. }
            | Link::External { title, .. }
            | Link::UserDefined { title, .. } => title,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Link::Hard { .. } => "H5L_TYPE_HARD",
            Link::Soft { .. } => "H5L_TYPE_SOFT",
            Link::External { .. } => "H5L_TYPE_EXTERNAL",
            Link::UserDefined { .. } => "H5L_TYPE_USER_DEFINED",
        }
    }

    pub fn properties(&self) -> &LinkCreationProperties {
        match self {
            Link::Hard { properties, .. }
            | Link::Soft { properties, .. }
            | Link::External { properties, .. }
            | Link::UserDefined { properties, .. } => properties,
        }
    }

    /// Hard link target, if this is a hard link
    pub fn target(&self) -> Option<(Collection, &R)> {
        match self {
            Link::Hard { collection, id, .. } => Some((*collection, id)),
            _ => None,
        }
    }

    /// Rebuild this link with its hard link target translated by `f`
    pub fn try_map_target<S, E>(
        &self,
        f: impl FnOnce(Collection, &R) -> Result<S, E>,
    ) -> Result<Link<S>, E> {
        Ok(match self {
            Link::Hard {
                title,
                collection,
                id,
                properties,
            } => Link::Hard {
                title: title.clone(),
                collection: *collection,
                id: f(*collection, id)?,
                properties: *properties,
            },
            Link::Soft {
                title,
                h5path,
                properties,
            } => Link::Soft {
                title: title.clone(),
                h5path: h5path.clone(),
                properties: *properties,
            },
            Link::External {
                title,
                file,
                h5path,
                properties,
            } => Link::External {
                title: title.clone(),
                file: file.clone(),
                h5path: h5path.clone(),
                properties: *properties,
            },
            Link::UserDefined {
                title,
                link_class,
                data,
                properties,
            } => Link::UserDefined {
                title: title.clone(),
                link_class: *link_class,
                data: data.clone(),
                properties: *properties,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hard_link_wire_shape() {
        let id = Identifier::new_v4();
        let link = Link::hard("dset1", Collection::Datasets, id);
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(
            json,
            json!({"class": "H5L_TYPE_HARD", "title": "dset1", "collection": "datasets", "id": id.to_string()})
        );
        assert_eq!(serde_json::from_value::<Link>(json).unwrap(), link);
    }

    #[test]
    fn test_soft_and_external_links_keep_paths() {
        let soft: Link = serde_json::from_value(json!({"class": "H5L_TYPE_SOFT", "title": "up", "h5path": "/"})).unwrap();
        assert_eq!(soft.title(), "up");
        assert!(soft.target().is_none());

        let external: Link = serde_json::from_value(json!({
            "class": "H5L_TYPE_EXTERNAL", "title": "ext", "file": "other.h5", "h5path": "/data",
            "creationProperties": {"nameCharEncoding": "H5T_CSET_UTF8"}
        }))
        .unwrap();
        assert_eq!(external.class_name(), "H5L_TYPE_EXTERNAL");
        assert!(!external.properties().is_empty());
    }

    #[test]
    fn test_unknown_link_class_rejected() {
        let result = serde_json::from_value::<Link>(json!({"class": "H5L_TYPE_ERROR", "title": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_user_defined_class_range() {
        assert!(!is_user_defined_link_class(1));
        assert!(is_user_defined_link_class(USER_DEFINED_LINK_CLASS_MIN));
        assert!(is_user_defined_link_class(255));
        assert!(!is_user_defined_link_class(256));
    }

    #[test]
    fn test_try_map_target_only_touches_hard_links() {
        let id = Identifier::new_v4();
        let hard = Link::hard("g", Collection::Groups, id);
        let mapped: Link<u64> = hard.try_map_target(|_, _| Ok::<_, ()>(7)).unwrap();
        assert_eq!(mapped.target(), Some((Collection::Groups, &7)));

        let soft: Link = Link::soft("s", "/a/b");
        let mapped: Link<u64> = soft.try_map_target(|_, _| Err(())).unwrap();
        assert_eq!(mapped, Link::soft("s", "/a/b"));
    }
}
