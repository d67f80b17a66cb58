//! 树路径
//!
//! 路径是一串从根开始的兄弟索引，字符串形式为 `"0:3:1"`。

use crate::error::TreeError;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreePath(Vec<usize>);

impl TreePath {
    /// 空路径（指向根本身，不对应任何行）
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_indices(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn append_index(&mut self, index: usize) {
        self.0.push(index);
    }

    pub fn prepend_index(&mut self, index: usize) {
        self.0.insert(0, index);
    }

    /// 最后一级索引
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// 父路径；空路径没有父路径
    pub fn parent(&self) -> Option<TreePath> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// 第 `index` 个子行的路径
    pub fn child(&self, index: usize) -> TreePath {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }
}

impl From<Vec<usize>> for TreePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl From<&[usize]> for TreePath {
    fn from(indices: &[usize]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

impl FromStr for TreePath {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TreeError::MalformedPath(s.to_string()));
        }
        s.split(':')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .map_err(|_| TreeError::MalformedPath(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(TreePath)
    }
}
