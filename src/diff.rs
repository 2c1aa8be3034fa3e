//! Diff chunking
//!
//! A commit's patch is split into per-file units on `diff --git` boundaries,
//! then greedily packed into chunks no larger than a byte ceiling so each
//! chunk fits a single generation request. Units are never reordered and
//! concatenating the emitted chunks gives back the original patch.
//!
//! A single file whose patch is larger than the ceiling is cut into
//! consecutive fixed-size slices. Only the first slice carries the file
//! header; later slices are bare continuation text.

const FILE_MARKER: &str = "diff --git ";

/// Split a patch into per-file units. Every unit keeps its trailing newline,
/// so `units.concat() == patch`. Text before the first file marker becomes
/// its own unit. Blank input yields no units.
pub fn split_patch(patch: &str) -> Vec<&str> {
   if patch.trim().is_empty() {
      return Vec::new();
   }

   let mut starts: Vec<usize> = patch
      .match_indices(FILE_MARKER)
      .map(|(idx, _)| idx)
      .filter(|&idx| idx == 0 || patch.as_bytes()[idx - 1] == b'\n')
      .collect();

   if starts.first() != Some(&0) {
      starts.insert(0, 0);
   }

   let mut units = Vec::with_capacity(starts.len());
   for (i, &start) in starts.iter().enumerate() {
      let end = starts.get(i + 1).copied().unwrap_or(patch.len());
      units.push(&patch[start..end]);
   }
   units
}

/// Greedy order-preserving bin fill of units into chunks of at most `limit`
/// bytes. Units bigger than `limit` are force-sliced.
pub fn pack_chunks(units: &[&str], limit: usize) -> Vec<String> {
   let mut chunks = Vec::new();
   let mut buffer = String::new();

   for unit in units {
      if buffer.len() + unit.len() <= limit {
         buffer.push_str(unit);
         continue;
      }

      if !buffer.is_empty() {
         chunks.push(std::mem::take(&mut buffer));
      }

      if unit.len() > limit {
         chunks.extend(force_slice(unit, limit).into_iter().map(str::to_string));
      } else {
         buffer.push_str(unit);
      }
   }

   if !buffer.is_empty() {
      chunks.push(buffer);
   }

   chunks
}

/// `split_patch` followed by `pack_chunks`.
pub fn chunk_patch(patch: &str, limit: usize) -> Vec<String> {
   pack_chunks(&split_patch(patch), limit)
}

/// Cut `text` into consecutive slices of at most `limit` bytes, on char
/// boundaries. A char wider than `limit` is emitted alone.
fn force_slice(text: &str, limit: usize) -> Vec<&str> {
   let mut slices = Vec::new();
   let mut rest = text;

   while !rest.is_empty() {
      let mut cut = limit.min(rest.len());
      while cut > 0 && !rest.is_char_boundary(cut) {
         cut -= 1;
      }
      if cut == 0 {
         cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
      }
      let (head, tail) = rest.split_at(cut);
      slices.push(head);
      rest = tail;
   }

   slices
}

/// File path named by a unit's `diff --git a/... b/...` header, if any.
pub fn unit_file_name(unit: &str) -> Option<&str> {
   let header = unit.lines().next()?.strip_prefix(FILE_MARKER)?;
   header
      .split_whitespace()
      .nth(1)
      .map(|s| s.trim_start_matches("b/"))
}

/// Files a chunk touches, in order. Continuation slices name none.
pub fn chunk_file_names(chunk: &str) -> Vec<&str> {
   chunk
      .lines()
      .filter(|line| line.starts_with(FILE_MARKER))
      .filter_map(unit_file_name)
      .collect()
}
