/// A name that matched a `LIST` command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Name {
    pub(crate) attributes: Vec<NameAttribute>,
    pub(crate) delimiter: Option<String>,
    pub(crate) name: String,
}

/// An attribute set for an IMAP name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum NameAttribute {
    /// It is not possible for any child levels of hierarchy to exist
    /// under this name; no child levels exist now and none can be
    /// created in the future.
    NoInferiors,

    /// It is not possible to use this name as a selectable mailbox.
    NoSelect,

    /// The mailbox has been marked "interesting" by the server; the
    /// mailbox probably contains messages that have been added since
    /// the last time the mailbox was selected.
    Marked,

    /// The mailbox does not contain any additional messages since the
    /// last time the mailbox was selected.
    Unmarked,

    /// A non-standard user- or server-defined name attribute.
    Custom(String),
}

impl NameAttribute {
    fn system(s: &str) -> Option<Self> {
        match s {
            "\\Noinferiors" => Some(NameAttribute::NoInferiors),
            "\\Noselect" => Some(NameAttribute::NoSelect),
            "\\Marked" => Some(NameAttribute::Marked),
            "\\Unmarked" => Some(NameAttribute::Unmarked),
            _ => None,
        }
    }
}

impl From<String> for NameAttribute {
    fn from(s: String) -> Self {
        if let Some(f) = NameAttribute::system(&s) {
            f
        } else {
            NameAttribute::Custom(s)
        }
    }
}

impl From<&str> for NameAttribute {
    fn from(s: &str) -> Self {
        if let Some(f) = NameAttribute::system(s) {
            f
        } else {
            NameAttribute::Custom(s.to_string())
        }
    }
}

impl From<imap_proto::NameAttribute<'_>> for NameAttribute {
    fn from(a: imap_proto::NameAttribute<'_>) -> Self {
        use imap_proto::NameAttribute as A;
        match a {
            A::NoInferiors => NameAttribute::NoInferiors,
            A::NoSelect => NameAttribute::NoSelect,
            A::Marked => NameAttribute::Marked,
            A::Unmarked => NameAttribute::Unmarked,
            // non-standard attributes arrive verbatim, backslash included
            A::Extension(s) => NameAttribute::Custom(s.to_string()),
            other => NameAttribute::Custom(format!("{:?}", other)),
        }
    }
}

impl Name {
    /// Attributes of this name.
    pub fn attributes(&self) -> &[NameAttribute] {
        &self.attributes[..]
    }

    /// The hierarchy delimiter is a character used to delimit levels of hierarchy in a mailbox
    /// name. `None` means that no hierarchy exists; the name is a "flat" name.
    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// The mailbox name. Unless [`NameAttribute::NoSelect`] is indicated, the name is valid as an
    /// argument for commands, such as `SELECT`, that accept mailbox names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this name can be passed to `SELECT` and friends.
    pub fn selectable(&self) -> bool {
        !self.attributes.contains(&NameAttribute::NoSelect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_attributes_keep_their_wire_form() {
        let attr = imap_proto::NameAttribute::Extension("\\HasNoChildren".into());
        assert_eq!(
            NameAttribute::from(attr),
            NameAttribute::Custom("\\HasNoChildren".to_string())
        );
    }

    #[test]
    fn rfc_attributes_map_to_their_variants() {
        assert_eq!(
            NameAttribute::from(imap_proto::NameAttribute::NoSelect),
            NameAttribute::NoSelect
        );
    }
}
