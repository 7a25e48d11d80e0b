// Mapping from Drive DTOs to domain models

use std::collections::{HashMap, HashSet};

use super::models::LibraryBook;
use crate::drive_client::{DriveFile, DriveFolder};

struct FolderInfo<'a> {
    name: &'a str,
    parent: Option<&'a str>,
}

/// Folder id lookup built once per library listing.
struct FolderIndex<'a>(HashMap<&'a str, FolderInfo<'a>>);

impl<'a> FolderIndex<'a> {
    fn new(folders: &'a [DriveFolder]) -> Self {
        Self(
            folders
                .iter()
                .map(|f| {
                    (
                        f.id.as_str(),
                        FolderInfo {
                            name: f.name.as_str(),
                            parent: f.first_parent(),
                        },
                    )
                })
                .collect(),
        )
    }

    /// The `/`-joined folder path of `folder_id`, walking parent links. Unknown folders
    /// (e.g. the Drive root) end the walk, and so does a repeated folder.
    fn path_of(&self, folder_id: Option<&str>) -> String {
        let mut parts: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = folder_id;
        while let Some(id) = current {
            let Some(folder) = self.0.get(id) else {
                break;
            };
            if !seen.insert(id) {
                tracing::warn!(folder_id = %id, "folder parent chain loops; truncating path");
                break;
            }
            parts.push(folder.name);
            current = folder.parent;
        }
        if parts.is_empty() {
            return String::new();
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }
}

pub fn map_file_to_book(file: &DriveFile, path: String) -> LibraryBook {
    LibraryBook {
        id: file.id.clone(),
        name: file.name.clone(),
        path,
        modified_time: file.modified_time.clone(),
        // Drive reports sizes as decimal strings
        size: file.size.as_deref().and_then(|s| s.trim().parse::<u64>().ok()),
        icon_link: file.icon_link.clone(),
    }
}

pub fn map_library(files: &[DriveFile], folders: &[DriveFolder]) -> Vec<LibraryBook> {
    let index = FolderIndex::new(folders);
    files
        .iter()
        .map(|f| map_file_to_book(f, index.path_of(f.first_parent())))
        .collect()
}
