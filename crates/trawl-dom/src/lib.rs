//! DOM tree data structures and the element query API.

mod entities;

pub use entities::decode_entities;

/// ID used to address nodes in the DOM arena.
pub type NodeId = usize;

/// Root node of every document.
pub const ROOT: NodeId = 0;

/// Single `name="value"` pair as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Root,
    Element {
        name: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

/// Parsed document: an arena of nodes rooted at [`ROOT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    pub fn empty() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Root,
            }],
        }
    }

    /// Appends an element under `parent`. Tag and attribute names are lowercased.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        name: &str,
        attributes: Vec<Attribute>,
    ) -> NodeId {
        let attributes = attributes
            .into_iter()
            .map(|attribute| Attribute {
                name: attribute.name.to_ascii_lowercase(),
                value: attribute.value,
            })
            .collect();

        self.push_node(
            parent,
            NodeData::Element {
                name: name.to_ascii_lowercase(),
                attributes,
            },
        )
    }

    /// Appends raw text under `parent`, merging with a preceding text sibling.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }

        let last_child = self
            .nodes
            .get(parent)
            .and_then(|node| node.children.last().copied());
        if let Some(last) = last_child {
            if let Some(NodeData::Text(existing)) = self.nodes.get_mut(last).map(|node| &mut node.data)
            {
                existing.push_str(text);
                return;
            }
        }

        self.push_node(parent, NodeData::Text(text.to_owned()));
    }

    fn push_node(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        let parent = if parent < self.nodes.len() { parent } else { ROOT };
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            data,
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn root(&self) -> ElementRef<'_> {
        ElementRef {
            document: self,
            id: ROOT,
        }
    }

    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        match self.nodes.get(id).map(|node| &node.data) {
            Some(NodeData::Element { .. }) | Some(NodeData::Root) => Some(ElementRef {
                document: self,
                id,
            }),
            _ => None,
        }
    }

    /// All elements named `tag` (any tag when `None`) accepted by `predicate`, in document order.
    pub fn find_all<P>(&self, tag: Option<&str>, predicate: P) -> Vec<ElementRef<'_>>
    where
        P: Fn(&ElementRef<'_>) -> bool,
    {
        self.root().find_all(tag, predicate)
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<ElementRef<'_>> {
        self.find_all(Some(tag), |_| true)
    }

    pub fn find(&self, tag: &str) -> Option<ElementRef<'_>> {
        self.find_by_tag(tag).into_iter().next()
    }

    /// Collapsed text of the first `<title>`, if any.
    pub fn title(&self) -> Option<String> {
        let title = self.find("title")?.text();
        if title.is_empty() { None } else { Some(title) }
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };

        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.nodes.get(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }

        out
    }
}

/// Borrowed handle to one element of a [`Document`].
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    document: &'a Document,
    id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn name(&self) -> &'a str {
        match &self.document.nodes[self.id].data {
            NodeData::Element { name, .. } => name,
            _ => "",
        }
    }

    pub fn attributes(&self) -> &'a [Attribute] {
        match &self.document.nodes[self.id].data {
            NodeData::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Raw attribute value. Lookup is case-insensitive; the first occurrence wins.
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attributes()
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
            .map(|attribute| attribute.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Descendant text nodes concatenated as written, entities untouched.
    pub fn raw_text(&self) -> String {
        let mut out = String::new();
        for id in self.document.descendants(self.id) {
            if let NodeData::Text(text) = &self.document.nodes[id].data {
                out.push_str(text);
            }
        }
        out
    }

    /// Entity-decoded descendant text, each text run trimmed and joined by one space.
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        for id in self.document.descendants(self.id) {
            if let NodeData::Text(text) = &self.document.nodes[id].data {
                let decoded = decode_entities(text);
                let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
                if !collapsed.is_empty() {
                    parts.push(collapsed);
                }
            }
        }
        parts.join(" ")
    }

    pub fn children(&self) -> Vec<ElementRef<'a>> {
        self.document.nodes[self.id]
            .children
            .iter()
            .filter_map(|child| {
                let child = *child;
                match self.document.nodes[child].data {
                    NodeData::Element { .. } => Some(ElementRef {
                        document: self.document,
                        id: child,
                    }),
                    _ => None,
                }
            })
            .collect()
    }

    /// Descendant elements named `tag` (any when `None`) accepted by `predicate`.
    pub fn find_all<P>(&self, tag: Option<&str>, predicate: P) -> Vec<ElementRef<'a>>
    where
        P: Fn(&ElementRef<'_>) -> bool,
    {
        self.document
            .descendants(self.id)
            .into_iter()
            .filter_map(|id| {
                let NodeData::Element { name, .. } = &self.document.nodes[id].data else {
                    return None;
                };
                if tag.is_some_and(|tag| !name.eq_ignore_ascii_case(tag)) {
                    return None;
                }

                let element = ElementRef {
                    document: self.document,
                    id,
                };
                if predicate(&element) { Some(element) } else { None }
            })
            .collect()
    }
}
