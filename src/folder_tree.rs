use crate::model::{Document, FolderNode, TreeNode};

/// Group documents into a folder hierarchy rooted at `/`.
///
/// Every directory segment of a document's path becomes a `FolderNode`
/// (created on first encounter, in input order); the final segment is the
/// document itself. The tree is rebuilt from scratch on each call.
pub fn build_folder_tree<I>(documents: I) -> FolderNode
where
    I: IntoIterator<Item = Document>,
{
    let mut root = FolderNode::root();
    for doc in documents {
        let parts: Vec<&str> = doc.path.split('/').filter(|p| !p.is_empty()).collect();
        let dirs = parts.len().saturating_sub(1);
        let dirs: Vec<String> = parts[..dirs].iter().map(|s| s.to_string()).collect();

        let mut current = &mut root;
        for part in &dirs {
            current = current.child_folder_mut(part);
        }
        current.children.push(TreeNode::Document(doc));
    }
    root
}

impl FolderNode {
    pub fn root() -> Self {
        FolderNode {
            name: "root".into(),
            path: "/".into(),
            children: Vec::new(),
        }
    }

    /// Find or append the child folder for `segment`. Only folders are
    /// considered; a document with the same name is never reused.
    fn child_folder_mut(&mut self, segment: &str) -> &mut FolderNode {
        let child_path = format!("{}{segment}/", self.path);
        let pos = self.children.iter().position(|child| match child {
            TreeNode::Folder(f) => f.path == child_path,
            TreeNode::Document(_) => false,
        });
        let idx = match pos {
            Some(idx) => idx,
            None => {
                self.children.push(TreeNode::Folder(FolderNode {
                    name: segment.to_string(),
                    path: child_path,
                    children: Vec::new(),
                }));
                self.children.len() - 1
            }
        };
        match &mut self.children[idx] {
            TreeNode::Folder(f) => f,
            TreeNode::Document(_) => unreachable!("position only matches folders"),
        }
    }

    /// Order children for display: folders first (by name), then documents
    /// (by title, case-insensitive). Applied recursively.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| match (a, b) {
            (TreeNode::Folder(x), TreeNode::Folder(y)) => x.name.cmp(&y.name),
            (TreeNode::Folder(_), TreeNode::Document(_)) => std::cmp::Ordering::Less,
            (TreeNode::Document(_), TreeNode::Folder(_)) => std::cmp::Ordering::Greater,
            (TreeNode::Document(x), TreeNode::Document(y)) => x
                .title
                .to_lowercase()
                .cmp(&y.title.to_lowercase())
                .then_with(|| x.id.cmp(&y.id)),
        });
        for child in &mut self.children {
            if let TreeNode::Folder(f) = child {
                f.sort_children();
            }
        }
    }

    /// All documents in the tree, depth-first.
    pub fn documents(&self) -> Vec<&Document> {
        let mut out = Vec::new();
        self.collect_documents(&mut out);
        out
    }

    fn collect_documents<'a>(&'a self, out: &mut Vec<&'a Document>) {
        for child in &self.children {
            match child {
                TreeNode::Folder(f) => f.collect_documents(out),
                TreeNode::Document(d) => out.push(d),
            }
        }
    }

    /// Locate the folder with the given accumulated path (`/py/`, or `/py`).
    pub fn find_folder(&self, path: &str) -> Option<&FolderNode> {
        let mut wanted = path.trim().to_string();
        if !wanted.starts_with('/') {
            wanted.insert(0, '/');
        }
        if !wanted.ends_with('/') {
            wanted.push('/');
        }
        self.find_folder_exact(&wanted)
    }

    fn find_folder_exact(&self, path: &str) -> Option<&FolderNode> {
        if self.path == path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children.iter().find_map(|child| match child {
            TreeNode::Folder(f) => f.find_folder_exact(path),
            TreeNode::Document(_) => None,
        })
    }

    /// Indented outline: folders end in `/`, documents show title and path.
    pub fn outline(&self) -> String {
        let mut out = format!("{}\n", self.path);
        self.write_outline(&mut out, 1);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        for child in &self.children {
            match child {
                TreeNode::Folder(f) => {
                    out.push_str(&format!("{indent}{}/\n", f.name));
                    f.write_outline(out, depth + 1);
                }
                TreeNode::Document(d) => {
                    out.push_str(&format!("{indent}{} ({})\n", d.title, d.path));
                }
            }
        }
    }
}
