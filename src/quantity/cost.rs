quantity!(Cost, "€", 2);
