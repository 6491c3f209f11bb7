//! Recursive field selection tree.
use crate::error::{DqlError, Result};
use crate::query::modifier::{
    join_path, FacetRequest, FieldMeta, Modifiers, RenderedModifiers, SourceKind, PATH_SEPARATOR,
};
use crate::query::value::{validate_name, validate_predicate};
use crate::query::vars::VarTable;

/// Selector appended to every object block.
pub const UID_FIELD: &str = "uid";

/// Shape flags of a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldFlags {
    /// Field points at nodes and gets its own `{ ... uid }` block.
    pub object: bool,
    /// Field holds many values.
    pub list: bool,
    /// Edge facets are requested.
    pub facets: bool,
    /// Field follows a reverse edge (`~pred`).
    pub reverse: bool,
}

/// One node of the selection tree.
///
/// Trees are built top-down by the caller for each request, so they never
/// contain cycles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    name: String,
    alias: Option<String>,
    flags: FieldFlags,
    children: Vec<Field>,
}

impl Field {
    /// Scalar field; a leading `~` marks a reverse edge.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let flags = FieldFlags {
            reverse: name.starts_with('~'),
            ..FieldFlags::default()
        };
        Self {
            name,
            alias: None,
            flags,
            children: Vec::new(),
        }
    }

    /// Object field with the given children.
    pub fn object<I, F>(name: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        let mut field = Self::new(name);
        field.flags.object = true;
        field.children(children)
    }

    /// Adds a child, turning this field into an object field.
    pub fn child(mut self, child: impl Into<Field>) -> Self {
        self.flags.object = true;
        self.children.push(child.into());
        self
    }

    /// Adds several children.
    pub fn children<I, F>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.flags.object = true;
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Marks the field as list-valued.
    pub fn list(mut self) -> Self {
        self.flags.list = true;
        self
    }

    /// Requests the edge's facets.
    pub fn facets(mut self) -> Self {
        self.flags.facets = true;
        self
    }

    /// Renders the field under a different response key.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name as given, including any `~` marker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape flags.
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Child fields in selection order.
    pub fn child_fields(&self) -> &[Field] {
        &self.children
    }

    /// Builds a forest from slash-separated paths, merging shared prefixes.
    ///
    /// `["name", "friend/name", "friend/age"]` yields `name` and
    /// `friend { name age }`.
    pub fn from_paths<I, S>(paths: I) -> Result<Vec<Field>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roots = Vec::new();
        for path in paths {
            let segments: Vec<&str> = path.as_ref().split(PATH_SEPARATOR).collect();
            insert_path(&mut roots, &segments)?;
        }
        Ok(roots)
    }

    fn token(&self) -> Result<String> {
        match (&self.alias, self.flags.reverse) {
            (Some(alias), _) => {
                validate_name(alias)?;
                Ok(format!("{alias} : {}", self.name))
            }
            (None, true) => Ok(format!("{} : {}", self.name.trim_start_matches('~'), self.name)),
            (None, false) => Ok(self.name.clone()),
        }
    }

    /// Writes this field and its subtree into `out`.
    pub(crate) fn render(
        &self,
        modifiers: &Modifiers,
        prefix: &str,
        vars: &mut VarTable,
        out: &mut String,
    ) -> Result<()> {
        if self.name.is_empty() {
            return Err(DqlError::MissingFieldName);
        }
        validate_predicate(&self.name)?;
        let path = join_path(prefix, &self.name);

        let mut mods = modifiers.for_path(&path);
        if self.flags.facets && !modifiers.has_facets(&path) {
            mods.push(&FacetRequest);
        }
        let meta = FieldMeta {
            predicate: &self.name,
            alias: self.alias.as_deref(),
            source: SourceKind::Field,
        };
        let rendered = RenderedModifiers::render(&mut mods, &meta, vars)?;

        let aggregated = rendered.head.is_some();
        match rendered.head {
            Some(head) => out.push_str(&head),
            None => out.push_str(&self.token()?),
        }
        if !rendered.args.is_empty() {
            out.push_str(" (");
            out.push_str(&rendered.args.join(", "));
            out.push(')');
        }
        for directive in &rendered.directives {
            out.push(' ');
            out.push_str(directive);
        }
        // aggregates select a value, not a node
        if !aggregated && (self.flags.object || !self.children.is_empty()) {
            out.push(' ');
            render_selection(&self.children, modifiers, &path, vars, out)?;
        }
        Ok(())
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::new(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::new(name)
    }
}

/// Writes `{ child child ... uid }` for the fields under `path`.
///
/// The `uid` selector is always last; explicit `uid` children are folded
/// into it.
pub(crate) fn render_selection(
    fields: &[Field],
    modifiers: &Modifiers,
    path: &str,
    vars: &mut VarTable,
    out: &mut String,
) -> Result<()> {
    out.push('{');
    for field in fields {
        if field.name == UID_FIELD && field.alias.is_none() {
            continue;
        }
        out.push(' ');
        field.render(modifiers, path, vars, out)?;
    }
    out.push(' ');
    out.push_str(UID_FIELD);
    out.push_str(" }");
    Ok(())
}


fn insert_path(fields: &mut Vec<Field>, segments: &[&str]) -> Result<()> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(());
    };
    if first.is_empty() {
        return Err(DqlError::MissingFieldName);
    }
    let idx = match fields.iter().position(|f| f.name == *first) {
        Some(idx) => idx,
        None => {
            fields.push(Field::new(*first));
            fields.len() - 1
        }
    };
    if !rest.is_empty() {
        let field = &mut fields[idx];
        field.flags.object = true;
        insert_path(&mut field.children, rest)?;
    }
    Ok(())
}
