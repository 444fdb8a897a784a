// SPDX-License-Identifier: BSD-3-Clause

//! The global page table: every [`Page`] that exists, addressed by
//! [`PageId`], regardless of which [`crate::alloc::pool::Pool`] currently
//! owns it. Pages move between pools on promotion (spec §4.C step 9); the
//! arena is what makes a [`CellId`](super::cell::CellId) resolvable no
//! matter how many times its page has been promoted.

use super::cell::PageId;
use super::page::Page;
use super::platform::Platform;

pub struct Arena {
    pages: Vec<Option<Page>>,
    free_slots: Vec<PageId>,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    /// Allocates a fresh page for `generation`, consulting `platform` for
    /// permission (spec §4.A "request one or more fresh pages from the
    /// platform"). Returns `None` if the platform refuses; the caller
    /// decides what "out of memory" means at its level (spec §4.A
    /// "Failure semantics").
    pub fn new_page(&mut self, generation: u8, platform: &dyn Platform) -> Option<PageId> {
        if !platform.request_page() {
            return None;
        }
        let page = Page::new(generation);
        Some(if let Some(id) = self.free_slots.pop() {
            self.pages[id.0 as usize] = Some(page);
            id
        } else {
            let id = PageId(self.pages.len() as u32);
            self.pages.push(Some(page));
            id
        })
    }

    pub fn get(&self, id: PageId) -> &Page {
        self.pages[id.0 as usize]
            .as_ref()
            .expect("page id must refer to a live page")
    }

    pub fn get_mut(&mut self, id: PageId) -> &mut Page {
        self.pages[id.0 as usize]
            .as_mut()
            .expect("page id must refer to a live page")
    }

    /// Returns a page's storage to the platform (spec §4.A
    /// `free_empty_pages`).
    pub fn free(&mut self, id: PageId, platform: &dyn Platform) {
        self.pages[id.0 as usize] = None;
        self.free_slots.push(id);
        platform.release_page();
    }

    pub fn page_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_some()).count()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
