use crate::overlay::{DetectionBox, Rect, RegionGroup};

/// Partitions detection boxes into speech-bubble groups.
///
/// Boxes are visited in reading order (top to bottom, then left to right). A box joins
/// the running group when the gap between its top edge and the bottom edge of the box
/// visited just before it lies within `0..=y_threshold`. Boxes whose vertical ranges
/// overlap produce a negative gap and always start a new group.
pub fn group_boxes(boxes: &[DetectionBox], y_threshold: i32) -> Vec<RegionGroup> {
    let mut sorted: Vec<&DetectionBox> = boxes.iter().collect();
    sorted.sort_by_key(|item| (item.bbox.y_min(), item.bbox.x_min()));

    let mut groups = Vec::new();
    let mut current: Vec<DetectionBox> = Vec::new();
    let mut prev: Option<&DetectionBox> = None;

    for item in sorted {
        if let Some(prev) = prev {
            let vertical_distance = item.bbox.y_min() - prev.bbox.y_max();
            if !(0..=y_threshold).contains(&vertical_distance) {
                groups.extend(RegionGroup::from_boxes(std::mem::take(&mut current)));
            }
        }
        current.push(item.clone());
        prev = Some(item);
    }
    groups.extend(RegionGroup::from_boxes(current));
    groups
}

/// Smallest rectangle enclosing every box, or `None` for an empty slice.
pub fn group_box(boxes: &[DetectionBox]) -> Option<Rect> {
    let mut iter = boxes.iter();
    let first = iter.next()?.bbox;
    Some(iter.fold(first, |acc, item| acc.union(&item.bbox)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Rect {
        Rect::new(x_min, y_min, x_max, y_max).expect("valid rect")
    }

    fn boxes(rects: &[(i32, i32, i32, i32)]) -> Vec<DetectionBox> {
        rects
            .iter()
            .map(|&(a, b, c, d)| DetectionBox::new(rect(a, b, c, d)))
            .collect()
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_boxes(&[], 50).is_empty());
        assert!(group_box(&[]).is_none());
    }

    #[test]
    fn close_boxes_share_a_group() {
        let input = boxes(&[(0, 0, 100, 20), (0, 25, 100, 45), (0, 200, 100, 220)]);
        let groups = group_boxes(&input, 50);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].boxes().len(), 2);
        assert_eq!(groups[0].group_box(), rect(0, 0, 100, 45));
        assert_eq!(groups[1].boxes().len(), 1);
        assert_eq!(groups[1].group_box(), rect(0, 200, 100, 220));
    }

    #[test]
    fn input_order_does_not_matter() {
        let input = boxes(&[(0, 200, 100, 220), (0, 25, 100, 45), (0, 0, 100, 20)]);
        let groups = group_boxes(&input, 50);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].boxes()[0].bbox, rect(0, 0, 100, 20));
        assert_eq!(groups[0].boxes()[1].bbox, rect(0, 25, 100, 45));
    }

    #[test]
    fn gap_equal_to_threshold_still_merges() {
        let input = boxes(&[(0, 0, 10, 10), (0, 60, 10, 70)]);
        assert_eq!(group_boxes(&input, 50).len(), 1);
        assert_eq!(group_boxes(&input, 49).len(), 2);
    }

    #[test]
    fn vertically_overlapping_boxes_are_split() {
        let input = boxes(&[(0, 0, 50, 30), (60, 10, 120, 40)]);
        let groups = group_boxes(&input, 50);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn distance_is_measured_against_previous_box_not_group_head() {
        // Each step is 10px apart, so the chain keeps growing far past the threshold.
        let input = boxes(&[
            (0, 0, 10, 10),
            (0, 20, 10, 30),
            (0, 40, 10, 50),
            (0, 60, 10, 70),
            (0, 80, 10, 90),
        ]);
        let groups = group_boxes(&input, 15);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_box(), rect(0, 0, 10, 90));
    }

    #[test]
    fn grouping_is_an_exact_partition() {
        let mut seed = 0x2545_f491_u32;
        let mut next = move |limit: i32| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            (seed % limit as u32) as i32
        };
        for _ in 0..50 {
            let count = next(30) as usize;
            let input: Vec<DetectionBox> = (0..count)
                .map(|idx| {
                    let x = next(500);
                    let y = next(800);
                    let mut item =
                        DetectionBox::new(rect(x, y, x + 1 + next(120), y + 1 + next(60)));
                    item.text = Some(format!("box{}", idx));
                    item
                })
                .collect();
            let groups = group_boxes(&input, next(80));

            let mut seen: Vec<String> = groups
                .iter()
                .flat_map(|group| group.boxes().iter())
                .filter_map(|item| item.text.clone())
                .collect();
            seen.sort();
            let mut expected: Vec<String> = input.iter().filter_map(|i| i.text.clone()).collect();
            expected.sort();
            assert_eq!(seen, expected);

            for group in &groups {
                assert!(!group.boxes().is_empty());
                for member in group.boxes() {
                    assert!(group.group_box().contains(&member.bbox));
                }
            }
        }
    }

    #[test]
    fn combined_text_joins_members_in_reading_order() {
        let input = vec![
            DetectionBox::with_text(rect(0, 30, 80, 50), "world"),
            DetectionBox::new(rect(0, 55, 80, 70)),
            DetectionBox::with_text(rect(0, 0, 80, 20), " hello "),
        ];
        let groups = group_boxes(&input, 50);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].combined_text(), "hello world");
    }
}
